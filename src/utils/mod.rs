// src/utils/mod.rs

pub mod dates;
pub mod html;
pub mod jwt;
pub mod lenient_json;
