pub(super) const ROOT_LONG_ABOUT: &str = "\
Seal trees of files into a multi-generation integrity ledger

Treeseal hashes every file and directory in a tree and appends the result to an
append-only history kept in a .treeseal folder at the root of the tree. Every later
pass is checked against the first time each path and hash format was recorded, so
silent corruption is detected no matter how many generations have passed since.

CORE CONCEPTS:

  Scopes and generations:
    A scope is a directory holding a .treeseal folder, together with everything below
    it. Each sealing pass appends one generation to every scope it touches. Generation
    files are numbered without gaps and are never rewritten.

  Outcomes:
    Each (path, format) observation is decided against the scope's history:
      original  - first time the path was recorded at all
      verified  - digest equals the first digest ever recorded in this format
      failed    - digest differs (content or, for directories, naming changed)
      new       - the path is known but this format is not; it is only accepted
                  if another, previously recorded format verifies in the same pass

  Directory hashes:
    Every directory gets a content digest (over its children's content only) and a
    structure digest (over names and content). Renaming a file changes the structure
    digest of its parent but not its content digest.

  Nested scopes:
    A directory below the root that has its own .treeseal folder is a nested scope.
    By default its most recently sealed root hash is reused without re-reading its
    files. Use --reseal-nested to walk it and seal it as well.

  Self-integrity chain:
    .treeseal/chain binds every generation file to a content identifier of its own
    bytes. Editing, deleting or reordering generation files is detected on load.

COMMANDS:

  seal
    Hash the tree, report every failure and append a new generation.

  verify
    Hash the tree and report, without writing anything.

  show <PATH>
    Print every recorded entry of one path across all generations.

EXIT CODES:

  0    no failures
  1    content mismatch
  2    unreadable path
  3    directory hash mismatch
  4    missing path
  5    unexpected new path
  255  any other error (bad arguments, damaged history, refused commit)

  When several kinds of failure occur, the first in this list decides the code.

EXAMPLES:

  # Seal the current directory
  $ treeseal seal

  # Seal another directory with two formats
  $ treeseal -C /data seal --format sha256 --format cid

  # Automated integrity monitoring
  $ treeseal -C /data verify || alert_admin

  # Inspect the history of one file
  $ treeseal show docs/report.pdf

For detailed help on any command, use:
  treeseal <command> --help
";

pub(super) const SEAL_LONG_ABOUT: &str = "\
Hash the tree and append a new generation

Walks the tree below the current directory, hashes every file in every requested
format, reduces directories bottom-up and decides each observation against the
history. Content, directory, missing and unexpected-path failures are printed and
reflected in the exit code, but the generation is still written: it records what
was actually found.

A generation is refused as a whole, and nothing is written for any scope, if a
newly requested format cannot be confirmed for some path. That happens when none of
the formats previously recorded for the path verifies in the same pass. For example,
adding --format blake3 to a file whose sha256 no longer matches is refused, because
the new blake3 digest would vouch for content nobody has confirmed.

FORMAT SELECTION:

  Every --format is hashed. When none of them has been recorded for a path before,
  one previously recorded format is hashed as well, so the new ones can be
  confirmed. --benchmark chooses which:
    priority  - the first in the order sha256, blake3, xxh3, cid (default)
    original  - the format the path was first recorded in

IGNORING PATHS:

  Patterns use gitignore syntax and are matched relative to each scope root.
  .DS_Store, Thumbs.db and desktop.ini are always ignored. Patterns given with
  --ignore or --ignore-file are stored in the new generation and stay in effect for
  later passes. Ignored paths are neither hashed nor reported missing.

EXAMPLES:

  # First seal
  $ treeseal seal

  # Add a content identifier alongside the existing sha256
  $ treeseal seal --format cid

  # Preview without writing
  $ treeseal seal --dry-run

  # Re-hash nested scopes too
  $ treeseal seal --reseal-nested
";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Hash the tree and report, without writing anything

Performs the same walk and the same decisions as seal, including the check that
newly requested formats could be confirmed, but never writes a generation. Prints
one line per failure:

  M  content mismatch
  !  unreadable path
  D  directory hash mismatch
  R  missing path (recorded before, gone now)
  A  unexpected new path

Exit status is 0 only if nothing failed, which makes verify suitable for cron jobs
and CI pipelines.

EXAMPLES:

  $ treeseal verify
  $ treeseal -C /backup verify --format cid
";

pub(super) const SHOW_LONG_ABOUT: &str = "\
Print the recorded history of one path

PATH is relative to the current directory (see -C) and may name a file, a directory,
or '.' for the root. Every generation that recorded the path is listed with each hash
entry's format, outcome, digest and time. Directory entries also show their structure
digest. A path inside a nested scope is looked up in that scope's own history.
";
