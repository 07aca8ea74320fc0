//! System instruction for follow-up chat

/// Generates the system instruction that scopes the chat to one comparison
///
/// # Examples
///
/// ```
/// use device_duel::prompts::chat_prompt::generate_chat_instruction;
///
/// let instruction = generate_chat_instruction("Pixel 9 Pro", "iPhone 16 Pro");
/// assert!(instruction.contains("between Pixel 9 Pro and iPhone 16 Pro"));
/// ```
pub fn generate_chat_instruction(device_one: &str, device_two: &str) -> String {
    format!(
        "You are a helpful AI assistant specializing in tech device comparisons.\n\
         You have just provided an in-depth comparison between {device_one} and {device_two}.\n\
         The user will now ask follow-up questions based on this specific comparison.\n\
         Your answers should be concise, accurate, and directly related to the comparison context.\n\
         Do not introduce new topics unless asked. Base your knowledge on the information you used for the original comparison."
    )
}
