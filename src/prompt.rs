use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// One class image found in the prompt folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// File stem, shown to the subject as the class label
    pub class_name: String,
    pub image: PathBuf,
    /// Position in the canonical (file name sorted) order; used to name output files
    pub index: usize,
}

/// The classes shown in one repetition.
///
/// `prompts` keeps the canonical order forever. `display_order` holds indices
/// into it and is the only thing shuffling touches, so a captured buffer is
/// always filed under the class it was recorded for.
#[derive(Debug, Clone)]
pub struct PromptSet {
    prompts: Vec<Prompt>,
    display_order: Vec<usize>,
}

impl PromptSet {
    pub fn new(prompts: Vec<Prompt>) -> Self {
        let display_order = (0..prompts.len()).collect();
        Self {
            prompts,
            display_order,
        }
    }

    /// Lists `.jpg`/`.png` files directly inside `dir`, sorted by file name
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let prompts = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image(path))
            .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
            .enumerate()
            .map(|(index, image)| Prompt {
                class_name: image
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                image,
                index,
            })
            .collect();

        Ok(Self::new(prompts))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompt shown at position `slot` of the current display order
    pub fn at(&self, slot: usize) -> Option<&Prompt> {
        self.display_order
            .get(slot)
            .and_then(|&idx| self.prompts.get(idx))
    }

    pub fn displayed(&self) -> impl Iterator<Item = &Prompt> {
        self.display_order.iter().map(|&idx| &self.prompts[idx])
    }

    pub fn canonical(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.display_order.shuffle(rng);
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
