pub mod describe;
pub mod mbti;
pub mod mi;
pub mod questions;

pub use describe::ProfileDescriber;
pub use mbti::{Dimension, MbtiAnswer, MbtiProfile, MbtiScorer};
pub use mi::{Intelligence, MiAnswer, MiProfile, MiScorer};
pub use questions::{QuestionBank, QuestionBankError};
