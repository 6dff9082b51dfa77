pub mod events;
pub mod payos_service;
pub mod wallet_service;
