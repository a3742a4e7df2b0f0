pub mod hit_reader;
