//! Packet pagination and the server-side result cache.

use datasmith_core::packet::TablePacket;

use crate::registry::GenError;

/// The paginated pages of one generated packet, all sharing its id.
#[derive(Debug, Clone)]
pub struct PacketCache {
    pages: Vec<TablePacket>,
}

impl PacketCache {
    /// Slices a freshly generated packet into pages of its `page_size`.
    ///
    /// Diagnostics ride on page 0 only; every page keeps the shared id and
    /// column list, and concatenating the pages reproduces the original
    /// entry order.
    pub fn build(packet: TablePacket) -> Self {
        let page_size = packet.page_size.max(1);
        let total_entries = packet.entries.len();
        let total_pages = total_entries.div_ceil(page_size).max(1);

        let mut pages = Vec::with_capacity(total_pages);
        for page_idx in 0..total_pages {
            let start = page_idx * page_size;
            let end = (start + page_size).min(total_entries);
            let chunk: Vec<_> = packet.entries[start..end].to_vec();
            pages.push(TablePacket {
                id: packet.id.clone(),
                name: packet.name.clone(),
                columns: packet.columns.clone(),
                total_entries: chunk.len(),
                entries: chunk,
                errors: if page_idx == 0 {
                    packet.errors.clone()
                } else {
                    Vec::new()
                },
                page: page_idx,
                page_size,
                total_pages,
            });
        }
        Self { pages }
    }

    pub fn id(&self) -> &str {
        &self.pages[0].id
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page: usize) -> Option<&TablePacket> {
        self.pages.get(page)
    }

    /// Synthetic full-length packet: every page concatenated under the
    /// original id.
    pub fn full(&self) -> TablePacket {
        let first = &self.pages[0];
        let entries: Vec<_> = self
            .pages
            .iter()
            .flat_map(|p| p.entries.iter().cloned())
            .collect();
        TablePacket {
            id: first.id.clone(),
            name: first.name.clone(),
            columns: first.columns.clone(),
            errors: first.errors.clone(),
            page: 0,
            page_size: first.page_size,
            total_pages: 1,
            total_entries: entries.len(),
            entries,
        }
    }
}

/// Owner of the single cached result set; replaced atomically by each
/// generation.
#[derive(Debug, Default)]
pub struct Populator {
    cache: Option<PacketCache>,
}

impl Populator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches a generated packet and returns its first page.
    pub fn paginate(&mut self, packet: TablePacket) -> TablePacket {
        let cache = PacketCache::build(packet);
        let first = cache
            .page(0)
            .cloned()
            .unwrap_or_else(|| cache.full());
        self.cache = Some(cache);
        first
    }

    /// Fetches one page of the cached packet, or the synthetic full packet
    /// when `page` is `None`.
    pub fn packet_page(&self, id: &str, page: Option<usize>) -> Result<TablePacket, GenError> {
        let cache = self.cache.as_ref().ok_or(GenError::NoCache)?;
        if cache.id() != id {
            return Err(GenError::PacketMismatch(id.to_string()));
        }
        match page {
            None => Ok(cache.full()),
            Some(page_idx) => cache
                .page(page_idx)
                .cloned()
                .ok_or(GenError::PageOutOfRange {
                    page: page_idx,
                    total: cache.total_pages(),
                }),
        }
    }

    /// Drops the cached packet.
    pub fn clear(&mut self) {
        self.cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::packet::ErrorPacket;
    use pretty_assertions::assert_eq;

    fn packet(rows: usize, page_size: usize) -> TablePacket {
        let entries = (0..rows)
            .map(|i| vec![Some(i.to_string())])
            .collect();
        TablePacket::new(
            "teachers",
            vec!["n".into()],
            entries,
            vec![ErrorPacket::warning("n", "just testing")],
            page_size,
        )
    }

    #[test]
    fn pages_partition_the_batch() {
        let original = packet(25, 10);
        let id = original.id.clone();
        let cache = PacketCache::build(original);

        assert_eq!(cache.total_pages(), 3);
        assert_eq!(cache.page(0).unwrap().entries.len(), 10);
        assert_eq!(cache.page(2).unwrap().entries.len(), 5);
        assert!(cache.page(3).is_none());

        for (idx, page) in (0..3).map(|i| (i, cache.page(i).unwrap())) {
            assert_eq!(page.id, id);
            assert_eq!(page.page, idx);
            assert_eq!(page.total_pages, 3);
            assert_eq!(page.total_entries, page.entries.len());
        }

        // Errors ride on the first page only.
        assert_eq!(cache.page(0).unwrap().errors.len(), 1);
        assert!(cache.page(1).unwrap().errors.is_empty());
    }

    #[test]
    fn concatenated_pages_reproduce_the_batch() {
        let original = packet(25, 10);
        let expected = original.entries.clone();
        let cache = PacketCache::build(original);

        let rebuilt: Vec<_> = (0..cache.total_pages())
            .flat_map(|i| cache.page(i).unwrap().entries.clone())
            .collect();
        assert_eq!(rebuilt, expected);

        let full = cache.full();
        assert_eq!(full.entries, expected);
        assert_eq!(full.total_entries, 25);
        assert_eq!(full.total_pages, 1);
    }

    #[test]
    fn sum_of_page_lengths_matches_total() {
        let original = packet(25, 10);
        let total = original.total_entries;
        let cache = PacketCache::build(original);
        let sum: usize = (0..cache.total_pages())
            .map(|i| cache.page(i).unwrap().entries.len())
            .sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn empty_batch_still_has_one_page() {
        let cache = PacketCache::build(packet(0, 10));
        assert_eq!(cache.total_pages(), 1);
        assert!(cache.page(0).unwrap().entries.is_empty());
    }

    #[test]
    fn populator_cache_lookup() {
        let mut populator = Populator::new();
        assert!(matches!(
            populator.packet_page("nope", None).unwrap_err(),
            GenError::NoCache
        ));

        let first = populator.paginate(packet(25, 10));
        assert_eq!(first.page, 0);
        assert_eq!(first.entries.len(), 10);
        let id = first.id.clone();

        let second = populator.packet_page(&id, Some(1)).unwrap();
        assert_eq!(second.page, 1);

        assert!(matches!(
            populator.packet_page(&id, Some(9)).unwrap_err(),
            GenError::PageOutOfRange { .. }
        ));
        assert!(matches!(
            populator.packet_page("other-id", Some(0)).unwrap_err(),
            GenError::PacketMismatch(_)
        ));

        let full = populator.packet_page(&id, None).unwrap();
        assert_eq!(full.total_entries, 25);

        populator.clear();
        assert!(matches!(
            populator.packet_page(&id, None).unwrap_err(),
            GenError::NoCache
        ));
    }
}
