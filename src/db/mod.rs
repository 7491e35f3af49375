pub mod control;
pub mod settings;
pub mod tasks;
pub mod timeline;
