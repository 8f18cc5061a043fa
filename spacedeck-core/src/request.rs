use crate::CoreError;
use serde::Deserialize;

/// A change to a single card, decoded once at the boundary.
///
/// On the wire this is an object carrying exactly one of `front`, `back` or
/// `difficultyString`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CardUpdateBody")]
pub enum CardUpdate {
    EditFront(String),
    EditBack(String),
    Grade(String),
}

#[derive(Deserialize)]
struct CardUpdateBody {
    front: Option<String>,
    back: Option<String>,
    #[serde(rename = "difficultyString")]
    difficulty_string: Option<String>,
}

impl TryFrom<CardUpdateBody> for CardUpdate {
    type Error = CoreError;

    fn try_from(body: CardUpdateBody) -> Result<Self, Self::Error> {
        match (body.front, body.back, body.difficulty_string) {
            (Some(front), None, None) => Ok(CardUpdate::EditFront(front)),
            (None, Some(back), None) => Ok(CardUpdate::EditBack(back)),
            (None, None, Some(label)) => Ok(CardUpdate::Grade(label)),
            _ => Err(CoreError::Invalid(
                "expected exactly one of front, back, difficultyString",
            )),
        }
    }
}

/// Content edit for an existing card. `None` leaves the side unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardEdit {
    pub front: Option<String>,
    pub back: Option<String>,
}

impl CardEdit {
    pub fn is_empty(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }
}
