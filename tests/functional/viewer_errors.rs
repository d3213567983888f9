//! Embedded-viewer error handling
//!
//! A viewer embedded inside another embedded viewer must serve the
//! recursion error page rather than yet another copy of the tree.

use treeviewer_e2e::runner::{Suite, TestCase};
use treeviewer_e2e::{By, Harness, HarnessError, HarnessResult};

pub fn suite() -> Suite {
    Suite {
        file: "viewer_errors",
        cases: vec![
            TestCase::new("test_viewer_embedded", |h| Box::pin(test_viewer_embedded(h))),
            TestCase::new("test_viewer_embedded_no_linkouts", |h| {
                Box::pin(test_viewer_embedded_no_linkouts(h))
            }),
        ],
    }
}

/// Do we get the proper error page if we accidentally embed a viewer
/// within another viewer?
async fn test_viewer_embedded(h: &mut Harness) -> HarnessResult<()> {
    h.navigate("life?embed=3").await?;
    if !h.element_exists(By::Id("stop_recursion")).await? {
        return Err(HarnessError::AssertionFailed(
            "no #stop_recursion element on a nested embedded viewer page".to_string(),
        ));
    }
    Ok(())
}

/// The recursion error page renders inside somebody else's iframe, so it
/// must not offer links that lead the visitor away.
async fn test_viewer_embedded_no_linkouts(h: &mut Harness) -> HarnessResult<()> {
    h.navigate("life?embed=3").await?;
    if h.has_linkouts(false).await? {
        return Err(HarnessError::AssertionFailed(
            "embedded error page contains outbound links".to_string(),
        ));
    }
    Ok(())
}
