// src/handlers/mod.rs

pub mod access;
pub mod classes;
pub mod exams;
pub mod health;
