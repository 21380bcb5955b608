//! Saved snakes.
//!
//! A snake is stored as `{"controlpoints": [[x, y], ...], "flip": bool}`.

use serde::{Deserialize, Serialize};

use crate::snake::Snake;
use crate::types::{ControlPoint, SnakeError};

/// The persisted form of a snake: its control points and flip flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeFile {
    /// Control points, in order.
    pub controlpoints: Vec<ControlPoint>,
    /// Whether the normals are flipped.
    #[serde(default)]
    pub flip: bool,
}

impl SnakeFile {
    /// Capture the persistable state of `snake`.
    #[must_use]
    pub fn from_snake(snake: &Snake<'_>) -> Self {
        Self {
            controlpoints: snake.control_points().to_vec(),
            flip: snake.flip(),
        }
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SnakeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a saved snake.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::Json`] for malformed input, including points
    /// that are not 2-element integer arrays.
    pub fn from_json(json: &str) -> Result<Self, SnakeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replace `snake`'s points and flip flag with the saved ones.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a saved point lies outside the
    /// snake's image; the snake is left empty in that case.
    pub fn apply(&self, snake: &mut Snake<'_>) -> Result<(), SnakeError> {
        snake.reset_to(&self.controlpoints)?;
        if snake.flip() != self.flip {
            snake.flip_normals()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::energy::EnergyKind;
    use crate::field::Field;
    use crate::source::SourceImage;

    fn file() -> SnakeFile {
        SnakeFile {
            controlpoints: vec![
                ControlPoint::new(12, 40),
                ControlPoint::new(3, 7),
                ControlPoint::new(25, 19),
            ],
            flip: true,
        }
    }

    #[test]
    fn json_round_trip_preserves_order_and_flip() {
        let json = file().to_json().unwrap();
        assert_eq!(SnakeFile::from_json(&json).unwrap(), file());
    }

    #[test]
    fn reads_the_saved_layout() {
        let parsed =
            SnakeFile::from_json(r#"{"controlpoints": [[1, 2], [3, 4]], "flip": false}"#).unwrap();
        assert_eq!(
            parsed.controlpoints,
            vec![ControlPoint::new(1, 2), ControlPoint::new(3, 4)]
        );
        assert!(!parsed.flip);
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["controlpoints"][1], serde_json::json!([3, 4]));
    }

    #[test]
    fn malformed_points_are_rejected() {
        for json in [
            r#"{"controlpoints": [[1, 2, 3]], "flip": false}"#,
            r#"{"controlpoints": [[1.5, 2]], "flip": false}"#,
            r#"{"controlpoints": [1, 2]}"#,
        ] {
            assert!(matches!(SnakeFile::from_json(json), Err(SnakeError::Json(_))));
        }
    }

    #[test]
    fn snake_round_trip() {
        let image = SourceImage::from_field(Field::filled(50, 50, 9.0));
        let field = EnergyKind::Intensity.build(&image, 1, 1.0).unwrap();
        let mut snake = Snake::new(&field, 10.0).unwrap();
        file().apply(&mut snake).unwrap();
        assert!(snake.flip());
        assert_eq!(SnakeFile::from_snake(&snake), file());

        let unflipped = SnakeFile {
            flip: false,
            ..file()
        };
        unflipped.apply(&mut snake).unwrap();
        assert!(!snake.flip());
    }
}
