pub mod auto_complete;
