use crate::models::{ModuleKey, ModuleType};

use super::{ExerciseDefinition, LevelPolicy, DEFAULT_MAX_ITEMS_PER_LEVEL};

pub(super) fn policies() -> Vec<(ModuleType, LevelPolicy)> {
    let policy = |required_items: &[u32], trials_per_item, pass_threshold| LevelPolicy {
        required_items: required_items.to_vec(),
        max_items_per_level: DEFAULT_MAX_ITEMS_PER_LEVEL,
        trials_per_item,
        pass_threshold,
    };

    vec![
        (ModuleType::Articulation, policy(&[1, 3, 2, 2, 2], 3, 0.90)),
        (ModuleType::ExpressiveLanguage, policy(&[5, 5, 5], 1, 0.70)),
        (ModuleType::ReceptiveLanguage, policy(&[5, 5, 5], 1, 1.0)),
        (ModuleType::Fluency, policy(&[5, 5, 5, 3, 3], 1, 0.70)),
    ]
}

const ARTICULATION: &[(&str, [[&str; 3]; 5])] = &[
    ("s", [
        ["s", "sss", "hiss"],
        ["sa", "se", "si"],
        ["sun", "sock", "sip"],
        ["See the sun.", "Sit down.", "Pass the salt."],
        ["Sam saw seven shiny shells.", "The sun is very hot.", "She sells sea shells."],
    ]),
    ("r", [
        ["r", "rrr", "ra"],
        ["ra", "re", "ri"],
        ["rabbit", "red", "run"],
        ["Run to the road.", "Read the book.", "Red balloon."],
        ["Rita rides the red rocket.", "The rabbit raced around the yard.", "Robert ran really fast."],
    ]),
    ("l", [
        ["l", "la", "lal"],
        ["la", "le", "li"],
        ["lion", "leaf", "lamp"],
        ["Look at the lion.", "Lift the box.", "Light the lamp."],
        ["Lily loves lemons.", "The little lamb likes leaves.", "Lay the blanket down."],
    ]),
    ("k", [
        ["k", "ka", "ku"],
        ["ka", "ke", "ki"],
        ["kite", "cat", "car"],
        ["Kick the ball.", "Cook the rice.", "Clean the cup."],
        ["Keep the kite flying high.", "The cat climbed the kitchen counter.", "Kara kept a key in her pocket."],
    ]),
    ("th", [
        ["th", "thh", "th-hold"],
        ["tha", "the", "thi"],
        ["think", "this", "thumb"],
        ["Think about that.", "This is the thumb.", "They thank her."],
        ["Those three thieves thought they were free.", "This is my thumb.", "The therapist taught them slowly."],
    ]),
];

const ARTICULATION_INSTRUCTIONS: [&str; 5] = [
    "Say the sound",
    "Say the syllable",
    "Say the word",
    "Say the phrase",
    "Say the sentence",
];

/// (level, prompt, keywords, minimum words)
const EXPRESSIVE: &[(u32, &str, &[&str], u32)] = &[
    (1, "Describe the picture: a house, a tree and a family.", &["house", "tree", "family", "people", "home"], 5),
    (1, "Describe the scene: sun, waves and a beach.", &["sun", "beach", "water", "ocean", "sand"], 5),
    (1, "Describe the picture: a dog, a ball and running.", &["dog", "ball", "running", "playing", "pet"], 5),
    (1, "Describe the picture: an apple, a banana and an orange.", &["fruit", "food", "apple", "banana", "orange"], 5),
    (1, "Describe the picture: a car on a city street.", &["car", "road", "buildings", "driving", "street"], 5),
    (2, "Make a sentence with: boy, ball, playing", &["boy", "ball", "playing"], 4),
    (2, "Make a sentence with: cat, sleeping, couch", &["cat", "sleeping", "couch"], 4),
    (2, "Make a sentence with: girl, book, reading", &["girl", "book", "reading"], 4),
    (2, "Make a sentence with: mom, cooking, kitchen", &["mom", "cooking", "kitchen"], 4),
    (2, "Make a sentence with: children, park, running", &["children", "park", "running"], 4),
    (
        3,
        "A little bird wanted to fly. It tried many times but failed. The bird did not give up. Finally, it flew high in the sky.",
        &["bird", "fly", "tried", "sky"],
        10,
    ),
    (
        3,
        "Tim found a lost puppy in the park. The puppy was scared and hungry. Tim took the puppy home and gave it food. His family decided to keep the puppy.",
        &["puppy", "park", "food", "home", "family"],
        10,
    ),
    (
        3,
        "Sarah planted a small seed in her garden. She watered it every day. After many weeks, a beautiful flower grew. Sarah was very happy.",
        &["seed", "garden", "watered", "flower", "grew"],
        10,
    ),
    (
        3,
        "Ben loved to draw. Every day after school, he would draw pictures of animals. His teacher saw his drawings and put them on the wall. Ben felt proud.",
        &["draw", "animals", "teacher", "wall", "proud"],
        10,
    ),
    (
        3,
        "The rabbit and the turtle had a race. The rabbit ran very fast and then took a nap. The turtle walked slowly but never stopped. The turtle won the race.",
        &["rabbit", "turtle", "race", "slow", "won"],
        10,
    ),
];

const EXPRESSIVE_INSTRUCTIONS: [&str; 3] = [
    "Look at the picture and describe what you see.",
    "Use these words to make a sentence.",
    "Listen to the story and retell it in your own words.",
];

/// (level, instruction, expected answer)
const RECEPTIVE: &[(u32, &str, &str)] = &[
    (1, "Listen to the word and select the correct picture.", "apple"),
    (1, "Listen to the word and select the correct picture.", "dog"),
    (1, "Listen to the word and select the correct picture.", "car"),
    (1, "Listen to the word and select the correct picture.", "book"),
    (1, "Listen to the word and select the correct picture.", "sun"),
    (2, "Point to the blue circle.", "blue circle"),
    (2, "Point to the red square.", "red square"),
    (2, "Point to the yellow star.", "yellow star"),
    (2, "Point to the green square.", "green square"),
    (2, "Point to the purple heart.", "purple heart"),
    (3, "The cat is sleeping under the table. What is the cat doing?", "sleeping"),
    (3, "The boy is playing with a red ball. What color is the ball?", "red"),
    (3, "Mom is cooking dinner in the kitchen. Where is Mom?", "kitchen"),
    (3, "The bird is flying high in the sky. Where is the bird?", "sky"),
    (3, "Dad is reading a book to the children. What is Dad doing?", "reading"),
];

/// (level, instruction, target)
const FLUENCY: &[(u32, &str, &str)] = &[
    (1, "Take a deep breath, then use this word in a sentence.", "Hello"),
    (1, "Take a deep breath, then use this word in a sentence.", "Morning"),
    (1, "Take a deep breath, then use this word in a sentence.", "Welcome"),
    (1, "Take a deep breath, then use this word in a sentence.", "Sunshine"),
    (1, "Take a deep breath, then use this word in a sentence.", "Beautiful"),
    (2, "Expand this phrase into a longer sentence.", "Good morning everyone"),
    (2, "Expand this phrase into a longer sentence.", "How are you today"),
    (2, "Expand this phrase into a longer sentence.", "Thank you very much"),
    (2, "Expand this phrase into a longer sentence.", "Have a nice day"),
    (2, "Expand this phrase into a longer sentence.", "See you later friend"),
    (3, "Read this sentence, then keep speaking on the topic.", "The weather is very nice today and I feel happy"),
    (3, "Read this sentence, then keep speaking on the topic.", "I enjoy reading books in the morning with coffee"),
    (3, "Read this sentence, then keep speaking on the topic.", "My family and I like to go hiking on weekends"),
    (3, "Read this sentence, then keep speaking on the topic.", "Learning new things helps me grow and become better"),
    (3, "Read this sentence, then keep speaking on the topic.", "I practice speaking every day to improve my fluency"),
    (
        4,
        "Read the passage at a comfortable pace.",
        "The sun rises early in the morning. Birds start singing their beautiful songs. It is a peaceful time of day.",
    ),
    (
        4,
        "Read the passage at a comfortable pace.",
        "Reading helps improve vocabulary and comprehension. Take your time with each word. There is no need to rush.",
    ),
    (
        4,
        "Read the passage at a comfortable pace.",
        "Practice makes perfect in everything we do. Daily exercises help build confidence. Remember to breathe and stay calm.",
    ),
    (5, "Answer the question in your own words.", "What is your favorite hobby and why do you enjoy it?"),
    (5, "Answer the question in your own words.", "Tell me about your daily morning routine"),
    (5, "Answer the question in your own words.", "What makes you happy and why?"),
];

pub(super) fn exercises() -> Vec<ExerciseDefinition> {
    let mut exercises = Vec::new();

    for (sound, levels) in ARTICULATION {
        for (level, (items, instruction)) in (1u32..).zip(levels.iter().zip(ARTICULATION_INSTRUCTIONS)) {
            for (item_index, target) in (0u32..).zip(items) {
                exercises.push(ExerciseDefinition {
                    exercise_id: format!("{sound}-{level}-{}", item_index + 1),
                    module: ModuleKey::articulation(*sound),
                    level,
                    item_index,
                    order: item_index + 1,
                    instruction: instruction.to_string(),
                    target: (*target).to_string(),
                    expected_keywords: Vec::new(),
                    min_words: None,
                    active: true,
                });
            }
        }
    }

    push_numbered(&mut exercises, ModuleKey::expressive(), "expressive", EXPRESSIVE.iter().map(|(level, prompt, keywords, min_words)| {
        let instruction = level
            .checked_sub(1)
            .and_then(|i| EXPRESSIVE_INSTRUCTIONS.get(i as usize))
            .copied()
            .unwrap_or_default();
        (*level, instruction, *prompt, keywords.iter().map(|k| (*k).to_string()).collect(), Some(*min_words))
    }));

    push_numbered(&mut exercises, ModuleKey::receptive(), "receptive", RECEPTIVE.iter().map(|(level, instruction, answer)| {
        (*level, *instruction, *answer, Vec::new(), None)
    }));

    push_numbered(&mut exercises, ModuleKey::fluency(), "fluency", FLUENCY.iter().map(|(level, instruction, target)| {
        (*level, *instruction, *target, Vec::new(), None)
    }));

    exercises
}

/// Item indices restart at 0 for every level, in table order.
fn push_numbered<'a>(
    exercises: &mut Vec<ExerciseDefinition>,
    module: ModuleKey,
    prefix: &str,
    rows: impl Iterator<Item = (u32, &'a str, &'a str, Vec<String>, Option<u32>)>,
) {
    let mut next_index = std::collections::HashMap::<u32, u32>::new();

    for (level, instruction, target, expected_keywords, min_words) in rows {
        let slot = next_index.entry(level).or_insert(0);
        let item_index = *slot;
        *slot += 1;

        exercises.push(ExerciseDefinition {
            exercise_id: format!("{prefix}-{level}-{}", item_index + 1),
            module: module.clone(),
            level,
            item_index,
            order: item_index + 1,
            instruction: instruction.to_string(),
            target: target.to_string(),
            expected_keywords,
            min_words,
            active: true,
        });
    }
}
