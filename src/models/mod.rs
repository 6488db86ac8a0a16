pub mod difficulty;
pub mod paper_data;
pub mod question;

pub use difficulty::DifficultyDistribution;
pub use paper_data::PaperData;
pub use question::{
    strip_option_label, AnswerKeyEntry, Difficulty, OptionLabel, QuestionRecord, MISSING_OPTION,
    OPTION_COUNT,
};
