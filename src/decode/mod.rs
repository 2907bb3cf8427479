pub mod php;
pub mod typecho;
