/// Photo pipeline module
///
/// This module handles:
/// - Obtaining candidate photos from the camera, the library or the web (acquire.rs)
/// - Web image search URL building and click interception (search.rs)
/// - Decoding, cropping and re-encoding photos (transform.rs)

pub mod acquire;
pub mod search;
pub mod transform;
