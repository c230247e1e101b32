use crate::models::enums::Stage;

/// Patient answers per stage after which the machine moves on regardless of
/// what the policy says.
pub const MAX_ANSWERS_PER_STAGE: u32 = 5;

impl Stage {
    /// Fixed intake order. `Done` is terminal.
    pub const ORDER: [Stage; 6] = [
        Stage::ChiefComplaint,
        Stage::SymptomDetails,
        Stage::SafetyChecks,
        Stage::History,
        Stage::WrapUp,
        Stage::Done,
    ];

    /// The stage that follows this one. `Done` maps to itself.
    pub fn next(self) -> Stage {
        match self {
            Stage::ChiefComplaint => Stage::SymptomDetails,
            Stage::SymptomDetails => Stage::SafetyChecks,
            Stage::SafetyChecks => Stage::History,
            Stage::History => Stage::WrapUp,
            Stage::WrapUp | Stage::Done => Stage::Done,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Done
    }
}

/// Decides what to ask within a stage and when a stage has gathered enough.
///
/// The machine never inspects answer content; everything content-related
/// lives behind this trait.
pub trait StagePolicy: Send + Sync {
    /// Question to ask in `stage` after `asked` questions have already been
    /// asked there. `None` means the stage has nothing further to ask.
    fn question(&self, stage: Stage, asked: u32) -> Option<String>;

    /// Whether `answers` patient replies are enough to leave `stage`.
    fn is_satisfied(&self, stage: Stage, answers: u32) -> bool;
}

/// Fixed question lists with a per-stage quota of answers.
pub struct TemplatePolicy;

impl TemplatePolicy {
    pub fn quota(stage: Stage) -> u32 {
        match stage {
            Stage::ChiefComplaint => 1,
            Stage::SymptomDetails => 3,
            Stage::SafetyChecks => 2,
            Stage::History => 3,
            Stage::WrapUp => 1,
            Stage::Done => 0,
        }
    }

    pub fn questions(stage: Stage) -> &'static [&'static str] {
        match stage {
            Stage::ChiefComplaint => &[
                "To start, can you tell me in your own words what brings you in today?",
            ],
            Stage::SymptomDetails => &[
                "When did this problem first start?",
                "Has it been getting better, worse, or staying the same?",
                "Can you describe where in your body you notice it most?",
                "On a scale from 0 to 10, how bad is it at its worst?",
                "Is there anything that makes it better or worse?",
            ],
            Stage::SafetyChecks => &[
                "Have you noticed any alarming or sudden changes, like chest pain, trouble breathing, or feeling faint?",
                "Is there anything about your symptoms that particularly worries you?",
            ],
            Stage::History => &[
                "Do you have any ongoing medical conditions that a doctor has diagnosed in the past?",
                "What medications are you currently taking, including over-the-counter or herbal remedies?",
                "Do you have any allergies to medications, foods, or anything else?",
                "Is there any important family medical history you think your doctor should know about?",
                "Could you briefly describe your lifestyle, such as smoking, alcohol, or exercise habits?",
            ],
            Stage::WrapUp => &[
                "Is there anything else you would like your doctor to know before they review this information?",
            ],
            Stage::Done => &[],
        }
    }
}

impl StagePolicy for TemplatePolicy {
    fn question(&self, stage: Stage, asked: u32) -> Option<String> {
        Self::questions(stage)
            .get(asked as usize)
            .map(|q| (*q).to_string())
    }

    fn is_satisfied(&self, stage: Stage, answers: u32) -> bool {
        answers >= Self::quota(stage)
    }
}
