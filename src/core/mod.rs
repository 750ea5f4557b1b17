pub mod evidence;
pub mod oracle;
pub mod video;
