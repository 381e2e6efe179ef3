//! Tool output parsers

pub mod nikto;
pub mod nmap;
pub mod sqlmap;

pub use nikto::parse_nikto_output;
pub use nmap::parse_nmap_xml;
pub use sqlmap::parse_sqlmap_output;
