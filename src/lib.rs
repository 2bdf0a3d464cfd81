pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod schedule;
pub mod sources;
pub mod weather;
pub mod processing {
    pub mod layout;
    pub mod transform;
}
pub mod remote {
    pub mod epic;
    pub mod openweather;
}
pub mod render {
    pub mod compose;
    pub mod font;
    pub mod window;
}
pub mod tasks {
    pub mod materializer;
    pub mod poller;
    pub mod slideshow;
}
