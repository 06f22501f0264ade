pub mod frame_loop;
pub mod surface;
pub mod terminal;
pub mod visualizer;
