//! facegate-core: face descriptor extraction and matching.
//!
//! SCRFD finds faces and their landmarks, a recognition network turns the
//! aligned crop into a descriptor, and [`EuclideanMatcher`] finds the closest
//! enrolled profile under a distance threshold.

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use detector::{FaceBox, FaceDetector};
pub use extractor::{DescriptorExtractor, ExtractError, FaceAnalyzer, MultiFacePolicy};
pub use matcher::{EuclideanMatcher, MatchError, MatchPolicy, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use recognizer::FaceRecognizer;
pub use types::{DescriptorError, FaceDescriptor, MatchResult, Profile, PublicProfile};
