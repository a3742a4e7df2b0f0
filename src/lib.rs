pub mod core;
pub mod index;
pub mod query;
pub mod reader;
pub mod search;
pub mod parallel;
pub mod context;

pub use crate::core::cancel::Checkpoint;
pub use crate::core::config::{Config, SearchSettings};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{ContextSize, DocId, Hit, Span};
pub use crate::search::hits::Hits;
pub use crate::search::searcher::Searcher;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                             HITSTREAM STRUCT ARCHITECTURE                                   │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct QueryInfo                                      │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ id: u64                           // Results id of the top-level search      │ │    │
│  │  │ index: Arc<dyn CorpusIndex>       // Segments, forward index, content store  │ │    │
│  │  │ config: Arc<Config>               // Engine configuration                    │ │    │
│  │  │ settings: SearchSettings          // Max hits to process / count             │ │    │
│  │  │ checkpoint: Checkpoint            // Pause + cancel for the whole lineage    │ │    │
│  │  │ max_stats: Mutex<MaxStats>        // Limit flags shared by derived views     │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Hit       │  │ CapturedGroups   │  │ struct Checkpoint                     │    │
│  │ • doc: DocId     │  │ • names: Arc<[]> │  │ • token: CancellationToken            │    │
│  │ • start: u32     │  │ • groups: Map<   │  │ • pauser: Arc<Pauser>                 │    │
│  │ • end: u32       │  │   Hit, [Span]>   │  │   (Mutex + Condvar, AtomicBool)       │    │
│  └──────────────────┘  └──────────────────┘  └───────────────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────── COLLECTION LAYER ────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────────┐        ┌──────────────────────────────────────────────┐      │
│  │ trait SpanWeight         │──────▶ │ struct SegmentHitReader (one per segment)     │      │
│  │ • extract_terms()        │        │ • drive: Mutex<LiveCursor>                    │      │
│  │ • cursor(segment)        │        │ • buffer: Mutex<VecDeque<BufferedHit>>        │      │
│  └──────────────────────────┘        │ • state: NotStarted/Reading/Exhausted/Intr.   │      │
│                                       └──────────────────────────────────────────────┘      │
│                                                                                              │
│  ┌──────────────────────────────┐    ┌──────────────────────────────────────────────┐      │
│  │ struct SequentialCollector   │    │ struct ParallelCollector                      │      │
│  │ • segments in order          │    │ • readers: Arc<[SegmentHitReader]>            │      │
│  │ • drive: Mutex<Drive>        │    │ • rayon pool, min(cap, segments) workers      │      │
│  │ • publication: Publication   │    │ • RegistrationOrderMerge                      │      │
│  └──────────────────────────────┘    │ • errors: crossbeam channel                   │      │
│                 │                     └──────────────────────────────────────────────┘      │
│                 ▼                                         │                                  │
│  ┌────────────────────────────────────────────────────────▼───────────────────────────┐    │
│  │ trait HitSource: ensure_results_read(AtLeast(n) | All) + RwLock<HitsState>        │    │
│  │ Publication: single driver (try_lock), waiters on generation Condvar               │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── RESULTS LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │ struct Hits (Clone handle over Arc<dyn HitSource>)                                  │    │
│  │ • window(first, size)   • sample(params)       • sort(property)                     │    │
│  │ • group(property, max)  • filter(property, v)  • per_doc_results(max)               │    │
│  │ • contexts(size)        • kwics(size) [LRU]    • concordances(size, type)           │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────────┐  ┌──────────────────────┐  ┌────────────────────────────┐        │
│  │ struct HitGroups     │  │ struct DocResults    │  │ struct FilteredHits        │        │
│  │ • groups: Vec<Group> │  │ • PartialDoc cursor  │  │ • lazy HitSource           │        │
│  │ • largest / sum      │  │ • most_hits_in_doc   │  │ • batches of the source    │        │
│  └──────────────────────┘  └──────────────────────┘  └────────────────────────────┘        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── CONTEXT LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────┐  ┌──────────────────────┐  ┌────────────────────────────┐        │
│  │ ContextExtractor     │  │ struct Kwic          │  │ struct Concordances        │        │
│  │ • per doc, per annot │  │ • [punct,attrs,word] │  │ • from_kwics (XML <w>)     │        │
│  │ • [start,right,len,  │  │ • to_concordance()   │  │ • from_content_store       │        │
│  │    tokens...]        │  └──────────────────────┘  │   + Highlighter            │        │
│  └──────────────────────┘                            └────────────────────────────┘        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
