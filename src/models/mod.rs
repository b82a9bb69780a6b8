pub mod exam;
pub mod exam_question;
pub mod question;
