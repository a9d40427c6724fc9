//! Static safety guidance returned alongside a positive detection.

/// Fixed, non-personalized guidance shown when panic is detected.
pub const SAFETY_SUGGESTION: &str = "\
It seems like you're in distress. Please stay calm. Here's what you can do right now:

• Move to a safe and crowded place nearby.
Use the map to see directions and choose the nearest public or busy area. Avoid dark or isolated paths.

• Press the Emergency Button 🆘
This will immediately send your live location to your emergency contacts so they can reach you faster.

• Stay calm — you are not alone.
Take deep breaths. Help is on the way. Our chat assistant is here for emotional support. You can talk to us anytime.

• If you feel unsafe, try calling a friend or trusted contact and keep them updated on your location and surroundings.

• Keep your phone in your hand, stay visible, and make sure it's charged. If you have a power bank, plug it in.

Remember, you are strong, and you're doing the right thing. We're here with you every step of the way.";

pub fn safety_suggestion() -> String {
    SAFETY_SUGGESTION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_lists_every_action() {
        let text = safety_suggestion();
        assert_eq!(text.matches('•').count(), 5);
        assert!(text.contains("Emergency Button"));
        assert!(text.contains("safe and crowded place"));
    }
}
