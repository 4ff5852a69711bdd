pub mod auth_ports;
