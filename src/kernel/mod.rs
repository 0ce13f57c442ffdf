pub mod cancel;
pub mod confirm;
pub mod context;
pub mod dispatch;
pub mod event;
pub mod machine;
pub mod state;
pub mod telemetry;
pub mod time;
