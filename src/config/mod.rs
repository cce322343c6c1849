// ==========================================
// 珠宝定价引擎 - 配置层
// ==========================================

pub mod config_manager;

pub use config_manager::ConfigManager;
