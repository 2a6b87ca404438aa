use crate::profile::LearnerProfile;

const VISUAL_DIRECTIVE: &str = "\n\nBecause this student learns best visually, include illustrations where a picture would genuinely help. \
To request one, write a marker on its own in exactly this form: [IMAGE: <short description of the picture>]. \
For example: \"Photosynthesis happens in the leaves. [IMAGE: a green leaf absorbing sunlight with arrows showing carbon dioxide going in and oxygen coming out]\" \
Only describe what the picture should show; do not add any other text inside the brackets.";

/// System instruction tailored to the learner's age and learning style.
pub fn system_instruction(profile: &LearnerProfile) -> String {
    let mut instruction = format!(
        "You are a helpful AI tutor. Your student is {} years old and prefers {} learning style. \
         Tailor your responses accordingly to be age-appropriate and align with their learning preferences.",
        profile.age, profile.learning_style
    );
    if profile.is_visual() {
        instruction.push_str(VISUAL_DIRECTIVE);
    }
    instruction
}
