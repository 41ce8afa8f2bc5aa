//! Content-addressed keys for checkouts and built sites
//!
//! A key is the SHA256 of a canonical JSON document, hex encoded. The
//! document wraps the identity as `MaybeExists` so that the resolver's
//! certainty never changes where content is stored.

use crate::repo::{Answer, AnswerDocument, Repo};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use tracing::error;

#[derive(Debug, Serialize)]
struct CheckoutKeyDoc {
    answer: AnswerDocument,
}

#[derive(Debug, Serialize)]
struct RenderKeyDoc<'a> {
    answer: AnswerDocument,
    base_url: &'a str,
}

/// Key of the working copy for `repo`; independent of any render context
pub fn checkout_key(repo: &Repo) -> String {
    digest(&CheckoutKeyDoc {
        answer: canonical(repo),
    })
}

/// Key of the site built from `repo` for `base_url`
pub fn render_key(repo: &Repo, base_url: &str) -> String {
    digest(&RenderKeyDoc {
        answer: canonical(repo),
        base_url,
    })
}

fn canonical(repo: &Repo) -> AnswerDocument {
    Answer::MaybeExists(repo.clone()).to_document()
}

/// SHA-256 of the canonical JSON of `doc`
///
/// The key documents are plain strings and never fail to serialize. Should
/// that change, the failure is logged and the `Debug` form is hashed
/// instead, which still keeps distinct identities apart.
fn digest<T: Serialize + Debug>(doc: &T) -> String {
    let bytes = match serde_json::to_vec(doc) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Cannot serialize key document {:?}: {}", doc, e);
            format!("{:?}", doc).into_bytes()
        }
    };
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}
