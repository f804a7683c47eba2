// src/services/mod.rs

pub mod access;
pub mod exam_tree;
