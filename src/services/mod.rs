pub mod exam_question_service;
pub mod exam_service;
pub mod grading_service;
pub mod question_service;
pub mod shuffle_service;
