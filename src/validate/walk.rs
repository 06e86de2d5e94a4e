//! Whole-container validation driven by an explicit worklist.

use tracing::{debug, info};

use super::{Validator, Verdict};
use crate::archive::Archive;
use crate::container::{Container, Detector, FileKind};
use crate::error::{Advisory, Error};
use crate::fat::{FatSlice, FatTable};

/// Deepest nesting a container can legitimately have: fat file, archive,
/// fat member, object.
pub const MAX_DEPTH: usize = 4;

/// Verdict for one entity of a container.
#[derive(Debug)]
pub struct EntityReport {
    /// e.g. `libx.a(a.o) (for architecture arm64)`
    pub location: String,
    /// Kind of the entity
    pub kind: FileKind,
    /// Outcome of its checks
    pub verdict: Verdict,
}

/// Result of validating every entity of a container.
#[derive(Debug, Default)]
pub struct Report {
    /// Entities in visiting order: a container precedes what it holds.
    pub entities: Vec<EntityReport>,
    /// Advisories raised while walking
    pub advisories: Vec<Advisory>,
}

impl Report {
    /// Returns true if no entity was rejected.
    pub fn is_good(&self) -> bool {
        !self.entities.iter().any(|e| e.verdict.is_bad())
    }

    /// The rejections, in visiting order.
    pub fn errors(&self) -> impl Iterator<Item = &Error> + '_ {
        self.entities.iter().filter_map(|e| e.verdict.error())
    }
}

/// One pending entity.
struct Work<'a> {
    data: &'a [u8],
    /// Offset of `data` in the container
    base: u64,
    /// File and member part of the location
    name: String,
    slice: Option<FatSlice>,
    /// The entity is a fat file stored as an archive member
    in_archive: bool,
    depth: usize,
}

impl Work<'_> {
    fn location(&self) -> String {
        match &self.slice {
            Some(slice) => format!("{} (for architecture {})", self.name, slice.arch_name()),
            None => self.name.clone(),
        }
    }
}

/// Validates `container` and everything nested in it.
///
/// Entities are visited breadth first; a rejected entity is reported and
/// its contents are not visited, but its siblings still are.
pub fn validate_container(container: &Container, detector: &Detector<'_>) -> Report {
    let mut validator = Validator::new(*detector);
    let mut report = Report::default();
    let mut worklist = std::collections::VecDeque::new();
    worklist.push_back(Work {
        data: container.data(),
        base: 0,
        name: container.name().to_string(),
        slice: None,
        in_archive: false,
        depth: 1,
    });

    while let Some(work) = worklist.pop_front() {
        let location = work.location();
        let kind = detector.classify(work.data);
        debug!("{}: validating {} at depth {}", location, kind, work.depth);

        if work.depth > MAX_DEPTH {
            let error = Error::internal(format!("containers nested more than {MAX_DEPTH} deep"));
            report.entities.push(EntityReport {
                location: location.clone(),
                kind,
                verdict: Verdict::Bad(error.located(&location)),
            });
            continue;
        }

        let verdict = match kind {
            FileKind::Fat => {
                let verdict = if work.in_archive {
                    validator.check_fat_in_archive(work.data, work.base, &location)
                } else {
                    validator.check_fat(work.data, &location)
                };
                if verdict.is_good() {
                    if let Ok(table) = FatTable::parse(work.data) {
                        for slice in table.slices {
                            worklist.push_back(Work {
                                data: &work.data[slice.range()],
                                base: work.base + slice.offset,
                                name: work.name.clone(),
                                slice: Some(slice),
                                in_archive: false,
                                depth: work.depth + 1,
                            });
                        }
                    }
                }
                verdict
            }
            FileKind::Archive => {
                let verdict = validator.check_archive(work.data, work.base, work.slice.as_ref(), &location);
                if !verdict.is_bad() {
                    match Archive::parse(work.data, detector, &location) {
                        Ok(archive) => {
                            report.advisories.extend_from_slice(archive.diagnostics());
                            for index in archive.regular() {
                                let member = &archive.members()[index];
                                worklist.push_back(Work {
                                    data: archive.content(index),
                                    base: work.base + member.content_offset,
                                    name: format!("{}({})", work.name, member.name),
                                    slice: work.slice,
                                    in_archive: true,
                                    depth: work.depth + 1,
                                });
                            }
                        }
                        Err(err) => {
                            report.entities.push(EntityReport {
                                location: location.clone(),
                                kind,
                                verdict: Verdict::Bad(err.located(&location)),
                            });
                            continue;
                        }
                    }
                }
                verdict
            }
            FileKind::MachObject => validator.check_object(work.data, work.slice.as_ref(), &location),
            FileKind::ForeignBitcode | FileKind::Unknown => Verdict::NotApplicable,
        };

        if let Verdict::Bad(err) = &verdict {
            info!("{}", err);
        }
        report.entities.push(EntityReport {
            location,
            kind,
            verdict,
        });
    }

    report.advisories.extend(validator.take_advisories());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{build_archive, RawMember};
    use crate::fat::build_fat;
    use crate::macho::*;
    use crate::util::{align_up, ByteSex};

    fn object(cputype: u32, cpusubtype: u32) -> Vec<u8> {
        let mut data = build_object(ByteSex::Little, true, cputype, cpusubtype, &[("_f", N_SECT | N_EXT, 1, 0)]);
        data.resize(align_up(data.len() as u64, 8) as usize, 0);
        data
    }

    #[test]
    fn test_fat_of_archives() {
        let x = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let a = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let lib_x = build_archive(&[RawMember::extended("x.o", &x), RawMember::extended("y.o", &x)]);
        let lib_a = build_archive(&[RawMember::extended("a.o", &a)]);
        let data = build_fat(
            false,
            &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &lib_x), (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &lib_a)],
        );
        let container = Container::from_bytes("libu.a", data, &Detector::default());
        let report = validate_container(&container, &Detector::default());

        assert!(report.is_good());
        let locations: Vec<_> = report.entities.iter().map(|e| e.location.as_str()).collect();
        assert_eq!(
            locations,
            [
                "libu.a",
                "libu.a (for architecture x86_64)",
                "libu.a (for architecture arm64)",
                "libu.a(x.o) (for architecture x86_64)",
                "libu.a(y.o) (for architecture x86_64)",
                "libu.a(a.o) (for architecture arm64)",
            ]
        );
        assert!(report.advisories.is_empty());
    }

    #[test]
    fn test_bad_member_reported_siblings_visited() {
        let good = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let mut bad = good.clone();
        // sizeofcmds past the end of the member
        bad[20..24].copy_from_slice(&0x10000u32.to_le_bytes());
        let data = build_archive(&[RawMember::extended("bad.o", &bad), RawMember::extended("good.o", &good)]);
        let container = Container::from_bytes("lib.a", data, &Detector::default());
        let report = validate_container(&container, &Detector::default());

        assert!(!report.is_good());
        assert_eq!(report.entities.len(), 3);
        let errors: Vec<_> = report.errors().map(|e| e.to_string()).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("lib.a(bad.o): "), "{}", errors[0]);
        assert!(report.entities[2].verdict.is_good());
    }

    #[test]
    fn test_unknown_file_not_applicable() {
        let container = Container::from_bytes("notes.txt", b"hello".to_vec(), &Detector::default());
        let report = validate_container(&container, &Detector::default());
        assert!(report.is_good());
        assert!(matches!(report.entities[0].verdict, Verdict::NotApplicable));
    }
}
