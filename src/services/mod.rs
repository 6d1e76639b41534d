pub mod directions_api;
