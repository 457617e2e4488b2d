//! inkpost: a server-rendered blog with comments and image attachments.

pub mod backend;
pub mod comment;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod orm;
pub mod pagination;
pub mod post;
pub mod s3;
pub mod session;
pub mod ugc;
pub mod upload;
pub mod web;
