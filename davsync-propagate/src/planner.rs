use crate::item::{Direction, Instruction, SyncItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    LocalRemove,
    LocalMkdir,
    LocalRename,
    RemoteRemove,
    RemoteMkdir,
    RemoteRename,
    Upload,
    Download,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemJob {
    pub item: SyncItem,
    pub kind: JobKind,
}

/// A directory node: its own mkdir/rename/remove runs first, then the
/// children in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectoryJob {
    pub item: Option<SyncItem>,
    pub first: Option<ItemJob>,
    pub children: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Directory(DirectoryJob),
    Item(ItemJob),
}

/// Picks the leaf job for an item, or `None` when nothing needs doing
/// (directory-level Sync/Conflict, already-handled renames).
pub fn job_for(item: &SyncItem) -> Option<ItemJob> {
    let kind = match item.instruction {
        Instruction::Remove => match item.direction {
            Direction::Up => JobKind::RemoteRemove,
            Direction::Down => JobKind::LocalRemove,
        },
        Instruction::New if item.is_directory => match item.direction {
            Direction::Up => JobKind::RemoteMkdir,
            Direction::Down => JobKind::LocalMkdir,
        },
        Instruction::New | Instruction::Sync | Instruction::Conflict => {
            if item.is_directory {
                // directory mtime is not propagated
                return None;
            }
            match item.direction {
                Direction::Up => JobKind::Upload,
                Direction::Down => JobKind::Download,
            }
        }
        Instruction::Rename => match item.direction {
            Direction::Up => JobKind::RemoteRename,
            Direction::Down => JobKind::LocalRename,
        },
        Instruction::Ignore => JobKind::Ignore,
        Instruction::Deleted => return None,
    };
    Some(ItemJob {
        item: item.clone(),
        kind,
    })
}

enum Placement {
    Child,
    Deferred,
}

/// Orders a plan into a rooted tree of directory jobs.
///
/// Items are sorted lexicographically by path, which puts every parent
/// before its descendants (`/` sorts below the other path characters). A
/// stack of open directories mirrors the path nesting; directory removals
/// are deferred and re-appended to the root after everything else, so
/// children are removed or moved out before their parents go.
pub fn plan(mut items: Vec<SyncItem>) -> DirectoryJob {
    items.sort_by(|a, b| a.file.cmp(&b.file));

    let root = DirectoryJob::default();
    let mut stack: Vec<(String, DirectoryJob, Placement)> =
        vec![(String::new(), root, Placement::Child)];
    let mut deferred: Vec<Job> = Vec::new();
    let mut removed_directory = String::new();

    for item in items {
        if item.instruction == Instruction::Remove
            && !removed_directory.is_empty()
            && item.file.starts_with(&removed_directory)
        {
            // subsumed by the ancestor's removal
            continue;
        }

        while !item
            .file
            .starts_with(&stack.last().expect("planner stack never empty").0)
        {
            pop_into_parent(&mut stack, &mut deferred);
        }

        if item.is_directory {
            let placement = if item.instruction == Instruction::Remove {
                removed_directory = format!("{}/", item.file);
                Placement::Deferred
            } else {
                Placement::Child
            };
            let prefix = format!("{}/", item.file);
            let dir = DirectoryJob {
                first: job_for(&item),
                item: Some(item),
                children: Vec::new(),
            };
            stack.push((prefix, dir, placement));
        } else if let Some(job) = job_for(&item) {
            stack
                .last_mut()
                .expect("planner stack never empty")
                .1
                .children
                .push(Job::Item(job));
        }
    }

    while stack.len() > 1 {
        pop_into_parent(&mut stack, &mut deferred);
    }
    let (_, mut root, _) = stack.pop().expect("planner stack never empty");
    root.children.extend(deferred);
    root
}

fn pop_into_parent(stack: &mut Vec<(String, DirectoryJob, Placement)>, deferred: &mut Vec<Job>) {
    let (_, dir, placement) = stack.pop().expect("pop with parent below");
    match placement {
        Placement::Child => stack
            .last_mut()
            .expect("root stays on the stack")
            .1
            .children
            .push(Job::Directory(dir)),
        Placement::Deferred => deferred.push(Job::Directory(dir)),
    }
}
