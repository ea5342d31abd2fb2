mod ort_yolo;
pub mod image_ops;
pub mod nms;
pub mod session_pool;

pub use ort_yolo::*;
