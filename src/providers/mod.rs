pub mod quaiscan;
