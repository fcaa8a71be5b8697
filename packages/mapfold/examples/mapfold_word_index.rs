//! Example building an inverted word index over a set of documents with a staged map/reduce
//! workflow that reports its progress.

use mapfold::{Pool, Workflow};
use new_zealand::nz;
use testing::{index_document, merge_indexes, reference_index};

fn main() {
    let mut pool = Pool::new().unwrap();

    println!(
        "Indexing 200 documents with {} workers on {} processors...",
        pool.size(),
        Pool::cpu_count()
    );

    let workflow = Workflow::new().stages(nz!(4)).progress(|progress| {
        println!(
            "Stage {} of {} done, {} of {} documents indexed",
            progress.completed_stages(),
            progress.total_stages(),
            progress.items_processed(),
            progress.total_items()
        );
    });

    let index = pool
        .mapreduce_with(&workflow, index_document, merge_indexes, 0..200, None)
        .unwrap();

    println!("The index contains {} distinct words", index.len());

    if let Some((word, documents)) = index.iter().max_by_key(|(_, documents)| documents.len()) {
        println!("The most common word \"{word}\" occurs in {} documents", documents.len());
    }

    assert_eq!(index, reference_index(0..200));

    // The same workflow again, this time on a one-off pool that closes itself.
    let words = mapfold::mapconcat(
        |document: u32| index_document(document).into_keys().collect::<Vec<_>>(),
        0..3,
        Pool::builder().processes(nz!(2)),
    )
    .unwrap();

    println!("The first three documents contain {} words: {words:?}", words.len());

    pool.close();
    println!("Pool closed");
}
