//! Common utility code for noodles.

use std::fs::File;

use noodles_bgzf as bgzf;
use noodles_core::Position;
use noodles_csi::{self as csi, binning_index::index::reference_sequence::bin::Chunk};
use noodles_tabix as tabix;
use noodles_vcf as vcf;

/// Build TBI for bgzip-compressed VCF file at `path_src` and write to `path_dst`.
///
/// Returns the number of indexed records.
pub fn build_tbi<S, D>(path_src: S, path_dst: D) -> Result<usize, anyhow::Error>
where
    S: AsRef<std::path::Path>,
    D: AsRef<std::path::Path>,
{
    let mut reader = File::open(path_src.as_ref())
        .map(bgzf::Reader::new)
        .map(vcf::Reader::new)
        .map_err(|e| anyhow::anyhow!("error input file for tbi creation: {}", e))?;

    let header = reader
        .read_header()
        .map_err(|e| anyhow::anyhow!("error reading header: {}", e))?;

    let mut record = vcf::Record::default();

    let mut indexer = tabix::index::Indexer::default();
    indexer.set_header(csi::binning_index::index::header::Builder::vcf().build());

    let mut start_position = reader.get_ref().virtual_position();
    let mut count = 0;

    while reader
        .read_record(&header, &mut record)
        .map_err(|e| anyhow::anyhow!("problem reading record: {}", e))?
        != 0
    {
        let end_position = reader.get_ref().virtual_position();
        let chunk = Chunk::new(start_position, end_position);

        let reference_sequence_name = record.chromosome().to_string();
        let start = Position::try_from(usize::from(record.position()))
            .map_err(|e| anyhow::anyhow!("error converting start position: {}", e))?;
        let end = record
            .end()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .and_then(|position| {
                Position::try_from(usize::from(position))
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })
            .map_err(|e| anyhow::anyhow!("error converting end position: {}", e))?;

        indexer
            .add_record(&reference_sequence_name, start, end, chunk)
            .map_err(|e| anyhow::anyhow!("error adding record to tabix index: {}", e))?;

        start_position = end_position;
        count += 1;
    }

    let index = indexer.build();

    let mut writer = File::create(path_dst.as_ref())
        .map(tabix::Writer::new)
        .map_err(|e| anyhow::anyhow!("error output file for tbi creation: {}", e))?;
    writer
        .write_index(&index)
        .map_err(|e| anyhow::anyhow!("error writing tabix index: {}", e))?;

    Ok(count)
}

/// Write `text` as a bgzip-compressed file to `path`.
#[cfg(test)]
pub(crate) fn write_bgzf<P>(path: P, text: &str) -> Result<(), anyhow::Error>
where
    P: AsRef<std::path::Path>,
{
    use std::io::Write;

    let mut writer = File::create(path.as_ref()).map(bgzf::Writer::new)?;
    writer.write_all(text.as_bytes())?;
    writer.try_finish()?;

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    const VCF: &str = "##fileformat=VCFv4.3\n\
        ##contig=<ID=1,length=1000>\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
        1\t100\t.\tA\tG\t.\tPASS\t.\n\
        1\t200\t.\tC\tT\t.\tPASS\t.\n";

    #[test]
    fn build_tbi() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path_in = tmpdir.join("in.vcf.gz");
        let path_out = tmpdir.join("in.vcf.gz.tbi");
        super::write_bgzf(&path_in, VCF)?;

        let count = super::build_tbi(&path_in, &path_out)?;

        assert_eq!(count, 2);
        assert!(path_out.exists());

        Ok(())
    }

    #[test]
    fn build_tbi_missing_input() {
        let tmpdir = temp_testdir::TempDir::default();

        let res = super::build_tbi(tmpdir.join("missing.vcf.gz"), tmpdir.join("out.tbi"));

        assert!(res.is_err());
    }
}
