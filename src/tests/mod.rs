pub mod fakes;
mod web;
