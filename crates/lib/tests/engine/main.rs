mod common;

mod apply_tests;
mod graph_tests;
mod lua_tests;
