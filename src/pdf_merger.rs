use anyhow::{anyhow, Result};
use lopdf::{Document, Object, ObjectId};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub struct PdfMerger {
    documents: Vec<(String, Document)>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub async fn add_pdf(&mut self, path: &Path) -> Result<()> {
        let data = fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read PDF file {}: {}", path.display(), e))?;

        let document = Document::load_mem(&data)
            .map_err(|e| anyhow!("Failed to parse PDF file {}: {}", path.display(), e))?;

        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();

        debug!("Loaded PDF with {} pages from {}", document.get_pages().len(), path.display());
        self.documents.push((filename, document));

        Ok(())
    }

    /// Write all added documents, in order, as one PDF. Returns the page count.
    pub async fn save(&self, output_path: &Path) -> Result<usize> {
        if self.documents.is_empty() {
            return Err(anyhow!("No PDFs added to merge"));
        }

        let mut merged = if self.documents.len() == 1 {
            self.documents[0].1.clone()
        } else {
            self.merge()?
        };

        let page_count = merged.get_pages().len();

        let mut data = Vec::new();
        merged
            .save_to(&mut data)
            .map_err(|e| anyhow!("Failed to serialize merged PDF: {}", e))?;

        fs::write(output_path, data)
            .await
            .map_err(|e| anyhow!("Failed to write merged PDF to {}: {}", output_path.display(), e))?;

        info!("Successfully merged {} PDFs ({} pages) into {}",
              self.documents.len(), page_count, output_path.display());
        Ok(page_count)
    }

    fn merge(&self) -> Result<Document> {
        info!("Starting PDF merge process with {} documents", self.documents.len());

        // The first document's page tree becomes the root for every page.
        let mut merged = self.documents[0].1.clone();
        let pages_id = merged
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| anyhow!("First PDF has no page tree: {}", e))?;

        let mut all_page_ids: Vec<ObjectId> = merged.get_pages().into_values().collect();
        for page_id in &all_page_ids {
            flatten_inherited(&mut merged, *page_id);
        }

        let mut max_id = merged.max_id;

        for (i, (filename, document)) in self.documents.iter().enumerate().skip(1) {
            debug!("Processing document {}: {} with {} pages",
                   i + 1, filename, document.get_pages().len());

            let mut doc_copy = document.clone();

            // Renumber objects to avoid conflicts
            doc_copy.renumber_objects_with(max_id + 1);
            max_id = doc_copy.max_id;

            let pages: Vec<ObjectId> = doc_copy.get_pages().into_values().collect();
            for page_id in &pages {
                flatten_inherited(&mut doc_copy, *page_id);
            }

            merged.objects.extend(doc_copy.objects);
            all_page_ids.extend(pages);
        }

        for page_id in &all_page_ids {
            if let Ok(page) = merged.get_object_mut(*page_id).and_then(Object::as_dict_mut) {
                page.set("Parent", pages_id);
            }
        }

        let total = all_page_ids.len();
        let pages_dict = merged
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| anyhow!("Page tree root is not a dictionary: {}", e))?;
        pages_dict.set("Kids", all_page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>());
        pages_dict.set("Count", total as i64);

        merged.max_id = max_id;
        info!("Total pages collected: {}", total);

        Ok(merged)
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy attributes a page inherits from its ancestors onto the page itself,
/// so it can be re-parented without losing them.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return;
    };

    let mut missing: Vec<&[u8]> = INHERITABLE.iter().copied().filter(|key| !page.has(key)).collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut inherited = Vec::new();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if missing.is_empty() || depth > 64 {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };

        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                inherited.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}
