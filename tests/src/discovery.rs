mod arp;
mod isolation;
mod policy;
mod registry;
