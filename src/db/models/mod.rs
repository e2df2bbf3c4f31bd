pub mod change_request;
pub mod lesson;
pub mod lesson_request;
pub mod lesson_view;
pub mod notification;
pub mod review;
pub mod schedule;
pub mod subject;
pub mod user;
