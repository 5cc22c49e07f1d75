pub mod monitor;

pub use monitor::{
    ErrorSeverity, HealthError, HealthMonitorConfig, ModuleHealth, SystemHealth,
    SystemHealthMonitor,
};
