//! Image placement and figure annotation.
//!
//! The writer model first inserts `![description](images/frame_NNNN.jpg)`
//! lines into the essay. Figures are then numbered mechanically, and the
//! model weaves "see Figure N" references into the prose a few figures at a
//! time. Finally image paths are resolved against `frames/kept/`, either as
//! inline data URIs or as relative links.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use base64::Engine;
use regex::Regex;
use tracing::{info, warn};
use vessay_client::{LanguageModel, MessageRequest};
use vessay_media::write_atomic;
use vessay_models::Classification;

use crate::artifacts::RunDir;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::StepName;

/// Path prefix the model uses for images.
pub const IMAGE_PREFIX: &str = "images/";
/// Figures referenced per annotation call.
pub const ANNOTATION_BATCH: usize = 5;
const PLACE_MAX_TOKENS: u32 = 8192;
const ANNOTATE_MAX_TOKENS: u32 = 16384;

static IMAGE_MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.*?)\]\(([^)]+)\)").expect("valid image regex"));

static FRAME_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.*?)\]\((images/frame_\d+\.jpg)\)").expect("valid frame regex"));

/// One numbered figure in an annotated essay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub number: usize,
    pub alt: String,
    pub src: String,
}

/// Classifications whose image survived into `frames/kept/`, in time order.
pub async fn load_kept_frames(run: &RunDir) -> PipelineResult<Vec<Classification>> {
    let text = run
        .read_required(&run.classifications(), StepName::ExtractFrames)
        .await?;
    let all: Vec<Classification> = serde_json::from_str(&text)?;

    let kept_dir = run.kept_frames_dir();
    let mut kept: Vec<Classification> = all
        .into_iter()
        .filter(|c| kept_dir.join(&c.frame).is_file())
        .collect();
    kept.sort_by_key(|c| c.timestamp_secs());
    Ok(kept)
}

/// Prompt listing of the available images.
pub fn format_frame_list(frames: &[Classification]) -> String {
    frames
        .iter()
        .map(|f| format!("- {}{} [{}] - {}", IMAGE_PREFIX, f.frame, f.timestamp, f.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Caption every markdown image as `*Figure N: alt*`, numbering from 1.
pub fn number_figures(essay: &str) -> (String, Vec<Figure>) {
    let mut figures = Vec::new();
    let numbered = IMAGE_MARKDOWN.replace_all(essay, |caps: &regex::Captures| {
        let figure = Figure {
            number: figures.len() + 1,
            alt: caps[1].to_string(),
            src: caps[2].to_string(),
        };
        let rendered = format!("![{}]({})\n*Figure {}: {}*", figure.alt, figure.src, figure.number, figure.alt);
        figures.push(figure);
        rendered
    });
    (numbered.into_owned(), figures)
}

/// Prose references per figure, not counting the figure's own caption.
pub fn figure_references(essay: &str, figures: &[Figure]) -> Vec<(usize, usize)> {
    figures
        .iter()
        .map(|f| {
            let pattern = format!(r"Figure\s+{}\b", f.number);
            let count = Regex::new(&pattern)
                .map(|re| re.find_iter(essay).count())
                .unwrap_or(0);
            (f.number, count.saturating_sub(1))
        })
        .collect()
}

/// Names of kept frames the essay actually shows.
pub fn placed_frames(essay: &str) -> Vec<String> {
    FRAME_IMAGE
        .captures_iter(essay)
        .filter_map(|caps| Path::new(&caps[2]).file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect()
}

/// Inline every `images/frame_NNNN.jpg` reference as a JPEG data URI.
///
/// References whose file is missing from `kept_dir` are left untouched.
pub async fn embed_images(essay: &str, kept_dir: &Path) -> PipelineResult<String> {
    let mut out = String::with_capacity(essay.len());
    let mut last = 0;

    for caps in FRAME_IMAGE.captures_iter(essay) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        out.push_str(&essay[last..whole.start]);
        last = whole.end;

        let file_name = Path::new(&caps[2]).file_name().map(|n| n.to_os_string());
        let bytes = match file_name {
            Some(name) => match tokio::fs::read(kept_dir.join(name)).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        match bytes {
            Some(bytes) => out.push_str(&format!(
                "![{}](data:image/jpeg;base64,{})",
                &caps[1],
                base64::engine::general_purpose::STANDARD.encode(bytes)
            )),
            None => {
                warn!(image = &caps[2], "Placed image not found in kept frames, leaving path");
                out.push_str(&essay[whole]);
            }
        }
    }
    out.push_str(&essay[last..]);
    Ok(out)
}

/// Point `images/` references at `frames/kept/` relative to the run directory.
pub fn link_kept_frames(essay: &str) -> String {
    FRAME_IMAGE
        .replace_all(essay, |caps: &regex::Captures| {
            let src = caps[2].replacen(IMAGE_PREFIX, "frames/kept/", 1);
            format!("![{}]({})", &caps[1], src)
        })
        .into_owned()
}

fn placement_prompt(essay: &str, frame_list: &str) -> String {
    format!(
        r#"Below are a markdown essay and a set of images taken from the video it was written from. Put each image where it fits best, on its own line between paragraphs, using markdown image syntax: ![description](path)

Use every image once. Change nothing in the essay except adding the image lines, and return the whole essay.

Images:
{}

Essay:
{}"#,
        frame_list, essay
    )
}

fn annotation_prompt(essay: &str, batch: &[Figure]) -> String {
    let summary = batch
        .iter()
        .map(|f| format!("- Figure {}: {}", f.number, f.alt))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"The markdown essay below has numbered figures, each captioned like *Figure N: description*. Add short references in the prose for the figures listed here, and only these.

- Phrase them naturally: "(see Figure 1)", "as Figure 3 shows", "Figure 2 illustrates"
- Put each reference in the paragraph most related to the figure
- Reference every listed figure at least once
- Leave image lines, captions and existing references exactly as they are
- Insert references into existing sentences; do not rewrite the prose
- Return the complete essay

Figures:
{}

Essay:
{}"#,
        summary, essay
    )
}

fn non_empty(text: String, what: &str) -> PipelineResult<String> {
    if text.trim().is_empty() {
        Err(PipelineError::invalid_output(format!("{} returned empty text", what)))
    } else {
        Ok(text)
    }
}

/// Places kept frames into an essay and annotates them as figures.
pub struct ImagePlacer {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl ImagePlacer {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Insert image lines for `frames` into `essay`.
    pub async fn place(&self, essay: &str, frames: &[Classification]) -> PipelineResult<String> {
        let request = MessageRequest::new(&self.model, PLACE_MAX_TOKENS)
            .user_text(placement_prompt(essay, &format_frame_list(frames)));
        let placed = non_empty(self.llm.create_message(&request).await?.text(), "image placement")?;

        let names = placed_frames(&placed);
        let missing: Vec<&str> = frames
            .iter()
            .map(|f| f.frame.as_str())
            .filter(|f| !names.iter().any(|n| n == f))
            .collect();
        info!(available = frames.len(), placed = names.len(), "Images placed");
        if !missing.is_empty() {
            warn!(missing = %missing.join(", "), "Some kept frames were not placed");
        }
        Ok(placed)
    }

    /// Number figures, then add prose references in batches.
    pub async fn annotate(&self, essay: &str) -> PipelineResult<String> {
        let (mut result, figures) = number_figures(essay);
        if figures.is_empty() {
            warn!("No images in essay, skipping figure annotation");
            return Ok(result);
        }

        for batch in figures.chunks(ANNOTATION_BATCH) {
            let request = MessageRequest::new(&self.model, ANNOTATE_MAX_TOKENS)
                .user_text(annotation_prompt(&result, batch));
            result = non_empty(self.llm.create_message(&request).await?.text(), "figure annotation")?;
        }

        for (number, count) in figure_references(&result, &figures) {
            let status = if count > 0 { "ok" } else { "MISSING" };
            info!(figure = number, references = count, status, "Figure reference check");
        }
        Ok(result)
    }

    /// Produce `essay_with_images.md` and `essay_final.md` for a run.
    ///
    /// Without kept frames the essay is copied through unchanged.
    pub async fn illustrate(&self, run: &RunDir, embed: bool) -> PipelineResult<()> {
        let essay = run.read_required(&run.essay(), StepName::Essay).await?;
        if !run.kept_frames_dir().is_dir() {
            return Err(PipelineError::missing_precondition(format!(
                "{} not found; run the {} step first",
                run.kept_frames_dir().display(),
                StepName::ExtractFrames
            )));
        }

        let frames = load_kept_frames(run).await?;
        if frames.is_empty() {
            warn!("No kept frames, copying essay as final");
            write_atomic(run.essay_final(), &essay).await?;
            return Ok(());
        }

        let placed = self.place(&essay, &frames).await?;
        write_atomic(run.essay_with_images(), &placed).await?;

        let annotated = self.annotate(&placed).await?;
        let finished = if embed {
            embed_images(&annotated, &run.kept_frames_dir()).await?
        } else {
            link_kept_frames(&annotated)
        };
        write_atomic(run.essay_final(), &finished).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_number_figures() {
        let essay = "Intro.\n\n![A chart](images/frame_0003.jpg)\n\nMore.\n\n![Code](images/frame_0010.jpg)";
        let (numbered, figures) = number_figures(essay);
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[1], Figure { number: 2, alt: "Code".into(), src: "images/frame_0010.jpg".into() });
        assert!(numbered.contains("![A chart](images/frame_0003.jpg)\n*Figure 1: A chart*"));
        assert!(numbered.ends_with("![Code](images/frame_0010.jpg)\n*Figure 2: Code*"));
    }

    #[test]
    fn test_figure_references_exclude_caption() {
        let (numbered, figures) = number_figures("![a](images/frame_0001.jpg)\n\n![b](images/frame_0002.jpg)");
        let annotated = format!("As Figure 1 shows, and again (see Figure 1).\n{}", numbered);
        let refs = figure_references(&annotated, &figures);
        assert_eq!(refs, vec![(1, 2), (2, 0)]);

        // Figure 1 must not match Figure 10
        let figures = vec![Figure { number: 1, alt: String::new(), src: String::new() }];
        assert_eq!(figure_references("*Figure 1: x*\nFigure 10 here", &figures), vec![(1, 0)]);
    }

    #[test]
    fn test_format_frame_list_and_links() {
        let json = serde_json::json!([{
            "category": "slide", "value": 4, "description": "Title slide",
            "frame": "frame_0002.jpg", "timestamp": "00:05", "file": "raw/frame_0002.jpg"
        }]);
        let frames: Vec<Classification> = serde_json::from_value(json).unwrap();
        assert_eq!(format_frame_list(&frames), "- images/frame_0002.jpg [00:05] - Title slide");

        assert_eq!(
            link_kept_frames("![x](images/frame_0002.jpg) ![y](https://example.com/a.jpg)"),
            "![x](frames/kept/frame_0002.jpg) ![y](https://example.com/a.jpg)"
        );
        assert_eq!(placed_frames("![x](images/frame_0002.jpg)"), vec!["frame_0002.jpg"]);
    }

    #[tokio::test]
    async fn test_embed_images() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("frame_0001.jpg"), [0xFFu8, 0xD8, 0xFF]).await.unwrap();

        let essay = "A\n![one](images/frame_0001.jpg)\nB\n![two](images/frame_0002.jpg)\nC";
        let embedded = embed_images(essay, dir.path()).await.unwrap();
        assert_eq!(
            embedded,
            "A\n![one](data:image/jpeg;base64,/9j/)\nB\n![two](images/frame_0002.jpg)\nC"
        );
    }
}
