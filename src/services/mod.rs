pub mod image_repository;
pub mod image_service;
pub mod revalidate;
