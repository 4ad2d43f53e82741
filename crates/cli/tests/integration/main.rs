mod common;

mod apply_tests;
mod destroy_tests;
mod status_tests;
mod synth_tests;
