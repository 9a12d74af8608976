use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::core::model::{ConversionConfig, InputFile};
use crate::plugins::pdf::{blocking, load, save, PdfError};
use crate::plugins::registry::Combiner;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

pub struct PdfMerge;

/// Copies inherited attributes onto the page so it survives being re-parented.
fn flattened_page(doc: &Document, page_id: ObjectId) -> anyhow::Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(node_id) = parent else { break };
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(v) = node.get(key) {
                    page.set(key.to_vec(), v.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(page)
}

/// Concatenates the pages of `documents` in order under the first document's catalog.
pub(crate) fn merge_documents(documents: Vec<Document>) -> anyhow::Result<Document> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = vec![];
    let mut objects: Vec<(ObjectId, Object)> = vec![];

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;
        for page_id in doc.get_pages().into_values() {
            pages.push((page_id, flattened_page(&doc, page_id)?));
        }
        objects.extend(doc.objects);
    }
    if pages.is_empty() {
        return Err(PdfError::NoPages.into());
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Dictionary)> = None;
    let mut root: Option<(ObjectId, Dictionary)> = None;

    for (id, object) in objects {
        let kind = object.type_name().unwrap_or_default().to_string();
        match kind.as_str() {
            "Catalog" => {
                if catalog.is_none() {
                    catalog = Some((id, object.as_dict()?.clone()));
                }
            }
            "Pages" => {
                if root.is_none() {
                    root = Some((id, object.as_dict()?.clone()));
                }
            }
            "Page" | "Outlines" | "Outline" => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }

    let (catalog_id, mut catalog) = catalog.context("no document catalog in inputs")?;
    let (root_id, mut root) = root.context("no page tree in inputs")?;

    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    for (id, mut page) in pages {
        page.set("Parent", root_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }

    root.remove(b"Parent");
    root.set("Count", kids.len() as i64);
    root.set("Kids", kids);
    merged.objects.insert(root_id, Object::Dictionary(root));

    catalog.set("Pages", root_id);
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.keys().map(|(n, _)| *n).max().unwrap_or(0);
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

#[async_trait]
impl Combiner for PdfMerge {
    fn name(&self) -> &'static str {
        "pdf-merge"
    }

    fn output_name(&self) -> String {
        "merged.pdf".to_string()
    }

    async fn combine(&self, inputs: &[InputFile], _config: &ConversionConfig) -> anyhow::Result<Bytes> {
        let blobs: Vec<(String, Bytes)> = inputs.iter().map(|f| (f.name.clone(), f.data.clone())).collect();
        let out = blocking(move || {
            let mut docs = Vec::with_capacity(blobs.len());
            for (name, data) in &blobs {
                docs.push(load(data).with_context(|| format!("load {}", name))?);
            }
            let mut merged = merge_documents(docs)?;
            save(&mut merged)
        })
        .await?;
        Ok(out.into())
    }
}
