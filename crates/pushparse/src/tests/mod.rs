mod encode;
mod property_chunking;
