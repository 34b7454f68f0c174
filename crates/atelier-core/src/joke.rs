use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joke {
    pub id: i64,
    pub setup: String,
    pub punchline: String,
}

/// A joke as it appears in the seed file, before it has been assigned an id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJoke {
    pub setup: String,
    pub punchline: String,
}

pub fn parse_seed_file(contents: &str) -> Result<Vec<NewJoke>, crate::error::CoreError> {
    let jokes: Vec<NewJoke> = serde_json::from_str(contents)?;
    Ok(jokes
        .into_iter()
        .filter(|j| !j.setup.trim().is_empty() && !j.punchline.trim().is_empty())
        .collect())
}
